use jluszcz_rust_utils::lambda;
use lambda_runtime::{LambdaEvent, service_fn};
use rewardseats::APP_NAME;
use rewardseats::config::TrackerConfig;
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    lambda::init(APP_NAME, module_path!(), false).await?;
    let func = service_fn(handler);
    lambda_runtime::run(func).await?;
    Ok(())
}

async fn handler(_event: LambdaEvent<Value>) -> Result<Value, lambda_runtime::Error> {
    let config = TrackerConfig::from_lambda_env()?;

    let report = rewardseats::check_and_notify(&config).await?;

    Ok(json!({ "result": report.to_string() }))
}
