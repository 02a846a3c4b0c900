use crossbeam_channel::bounded;
use rcp_mock_device::{MainLoop, NetworkThread, DEFAULT_ADDR};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let addr = parse_arg_value(&args, "--addr")
        .or_else(|| std::env::var("RCP_MOCK_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let addr_file = parse_arg_value(&args, "--addr-file").map(PathBuf::from);
    let run_for_ms = parse_arg_value(&args, "--run-for-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis);

    let (in_tx, in_rx) = bounded(rcp_mock_device::INBOUND_CAP);
    let (out_tx, out_rx) = bounded(rcp_mock_device::OUTBOUND_CAP);

    let net = match NetworkThread::spawn_with_addr(&addr, in_tx, out_rx) {
        Ok(n) => n,
        Err(e) => {
            error!(%addr, error = %e, "bind failed");
            std::process::exit(1);
        }
    };

    if let Some(path) = &addr_file {
        if let Err(e) = fs::write(path, net.listen_addr().to_string()) {
            error!(path = %path.display(), error = %e, "failed to write address file");
        }
    }

    println!("mock_device listening on ws://{}", net.listen_addr());

    let mut main_loop = MainLoop::new(in_rx, out_tx);

    let start = Instant::now();
    loop {
        main_loop.tick();
        thread::sleep(Duration::from_millis(10));
        if let Some(max) = run_for_ms {
            if start.elapsed() >= max {
                info!("run time elapsed");
                break;
            }
        }
    }

    net.shutdown();
}
