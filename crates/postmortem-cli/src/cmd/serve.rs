use crate::settings::{load_config, Overrides};
use anyhow::Context;
use std::path::Path;

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

pub fn run(config_path: Option<&Path>, overrides: Overrides, open_browser: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    config.ensure_valid()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local = listener.local_addr()?;

        println!(
            "postmortem → http://{local}  (generator: {} {})",
            config.generator.command,
            config.generator.args.join(" ")
        );
        println!("POST /api/generate_report to stream a report. Ctrl-C to stop.");

        postmortem_server::serve_on(config, listener, open_browser).await
    })
}
