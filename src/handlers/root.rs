pub const WELCOME_MESSAGE: &str = "Welcome to the gateway";

// default route
pub async fn root_handler() -> &'static str {
    WELCOME_MESSAGE
}
