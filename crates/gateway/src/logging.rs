use common::Environment;

pub const SERVICE_NAME: &str = "detector";

pub fn setup_logging(environment: Environment) {
    common::setup_logging(SERVICE_NAME, environment);
}
