mod commands;
mod render;

use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use panel_client::WsClient;
use panel_core::{
    ConnectionController, ConnectionState, PanelConfig, PanelView, RemoteClient, SessionConfig,
    SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

const TICK: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "panel_cli", about = "Terminal panel for a remote parameter tree")]
struct Args {
    /// Device host (overrides RCP_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Device port (overrides RCP_PORT).
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// 0 waits forever.
    #[arg(long, value_name = "MS")]
    connect_timeout_ms: Option<u64>,

    /// Log every wire message.
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Send compact value-only updates.
    #[arg(long, default_value_t = false)]
    value_updates: bool,

    /// Print the panel as JSON instead of a text tree.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Start idle instead of connecting right away.
    #[arg(long, default_value_t = false)]
    no_connect: bool,
}

impl Args {
    fn apply(&self, cfg: &mut PanelConfig) {
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(ms) = self.debounce_ms {
            cfg.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            cfg.connect_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        cfg.session.verbose_logging |= self.verbose;
        cfg.session.value_updates |= self.value_updates;
    }
}

struct Panel {
    config: PanelConfig,
    controller: ConnectionController,
    view: PanelView,
    json: bool,
    last_status: String,
}

impl Panel {
    fn new(config: PanelConfig, json: bool) -> Self {
        let runtime = tokio::runtime::Handle::current();
        let factory = move |session: &SessionConfig| -> Box<dyn RemoteClient> {
            Box::new(WsClient::new(*session, runtime.clone()))
        };
        let controller = ConnectionController::new(&config, Box::new(factory), Rc::new(SystemClock));
        Self {
            config,
            controller,
            view: PanelView::new(),
            json,
            last_status: String::new(),
        }
    }

    fn tick(&mut self) {
        if self.controller.poll() {
            self.view.sync(&self.controller.parameters());
        }
        let status = render::status_line(&self.controller);
        let status_changed = status != self.last_status;
        if status_changed {
            eprintln!("{status}");
            self.last_status = status;
        }
        if self.view.take_invalidated() {
            self.show();
        }
    }

    fn show(&mut self) {
        let nodes = self.view.render();
        if self.json {
            match render::render_json(&self.controller, &nodes) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("failed to encode panel: {e}"),
            }
        } else {
            print!("{}", render::render_tree(&nodes));
        }
    }

    /// Runs one command. Returns false when the panel should exit.
    fn execute(&mut self, cmd: Command) -> anyhow::Result<bool> {
        debug!(?cmd, "command");
        match cmd {
            Command::Connect { host, port } => {
                let host = host.unwrap_or_else(|| self.config.host.clone());
                let port = port.unwrap_or(self.config.port);
                self.controller.connect(&host, port);
            }
            Command::Disconnect => self.controller.disconnect()?,
            Command::Toggle => {
                let host = self.config.host.clone();
                self.controller.toggle(&host, self.config.port)?;
            }
            Command::Edit { id, text } => self.view.widget(id)?.input(&text)?,
            Command::Submit { id } => {
                let outcome = self.view.widget(id)?.submit(&mut self.controller)?;
                eprintln!("{id}: {outcome:?}");
            }
            Command::Set { id, text } => {
                let widget = self.view.widget(id)?;
                widget.input(&text)?;
                let outcome = widget.submit(&mut self.controller)?;
                eprintln!("{id}: {outcome:?}");
            }
            Command::Bang { id } => self.view.widget(id)?.activate(&mut self.controller)?,
            Command::Show => self.show(),
            Command::Help => eprintln!("{}", commands::HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn shutdown(&mut self) {
        if matches!(
            self.controller.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            let _ = self.controller.disconnect();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut config = PanelConfig::from_env()?;
    args.apply(&mut config);

    let filter = if config.session.verbose_logging && std::env::var_os("RUST_LOG").is_none() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    info!(host = %config.host, port = config.port, "starting panel");

    let mut panel = Panel::new(config, args.json);
    if !args.no_connect {
        panel.execute(Command::Connect {
            host: None,
            port: None,
        })?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => panel.tick(),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let cmd = match commands::parse(&line) {
                    Ok(Some(cmd)) => cmd,
                    Ok(None) => continue,
                    Err(e) => {
                        eprintln!("{e:#}");
                        continue;
                    }
                };
                match panel.execute(cmd) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("{e:#}"),
                }
            }
        }
    }

    panel.shutdown();
    // give the socket task a moment to finish the closing handshake
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
