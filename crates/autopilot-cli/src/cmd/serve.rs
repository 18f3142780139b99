use super::load_valid_config;
use std::path::Path;

pub fn run(config_path: Option<&Path>, port: Option<u16>) -> anyhow::Result<()> {
    let config = load_valid_config(config_path)?;
    for w in config.validate() {
        tracing::warn!("{}", w.message);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let addr = format!(
            "{}:{}",
            config.server.host,
            port.unwrap_or(config.server.port)
        );
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        println!("autopilot decision engine → http://{}", listener.local_addr()?);

        tokio::select! {
            res = autopilot_server::serve_on(config, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
