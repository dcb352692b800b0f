use anyhow::Result;
use clap::Parser;
use ptz_servo::cli::{Args, GatewayKind};
use ptz_servo::config::{ServoConfig, Target};
use ptz_servo::controller::ServoController;
use ptz_servo::dahua::DahuaGateway;
use ptz_servo::gateway::ActuatorGateway;
use ptz_servo::onvif_gateway::OnvifGateway;
use ptz_servo::{feed, http_client};
use std::io::Write;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let target = Target::from_args(&args)?;
    let config = ServoConfig::from_args(&args)?;

    let client = http_client::build(&target)?;
    let gateway: Arc<dyn ActuatorGateway> = match target.gateway() {
        GatewayKind::Dahua => {
            log::info!("dahua cgi {} channel {}", target.cgi_endpoint(), target.channel());
            Arc::new(DahuaGateway::new(client, &target))
        }
        GatewayKind::Onvif => Arc::new(OnvifGateway::connect(client, &target).await?),
    };

    let mut controller = ServoController::new(&config, gateway);
    feed::spawn_stdin(controller.sink())?;

    controller
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("ctrl-c handler failed: {err}");
            }
        })
        .await;
    Ok(())
}

fn init_logger() {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .init();
}
