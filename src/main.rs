use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use tokio::sync::mpsc;

use imu_collect::config::Args;
use imu_collect::display::format_readout;
use imu_collect::imu_client::ImuClient;
use imu_collect::link::Link;
use imu_collect::protocol::AXIS_NAMES;
use imu_collect::session::{now_ms, SaveOutcome, Session};
use imu_collect::simulate::spawn_simulator;
use imu_collect::types::{ConnectionState, ImuEvent};

/// Outcome of a background connect attempt.
type ConnectResult = Result<(mpsc::Receiver<ImuEvent>, Link)>;

/// Await the next event of the active link, or park forever when there is none.
async fn next_event(rx: &mut Option<mpsc::Receiver<ImuEvent>>) -> Option<ImuEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_help() {
    info!("Commands (type + Enter):");
    info!("  c          – connect");
    info!("  d          – disconnect");
    info!("  r          – start / stop recording");
    info!("  l <label>  – set the activity label");
    info!("  s          – save the last recording");
    info!("  q          – quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug for verbose output, e.g.:
    //   RUST_LOG=imu_collect=debug cargo run
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.client_config();

    if args.list {
        let devices = ImuClient::new(config).scan_all().await?;
        for d in &devices {
            println!("{}  [{}]", d.name, d.id);
        }
        if devices.is_empty() {
            println!("No IMU devices found.");
        }
        return Ok(());
    }

    let mut session = Session::new();
    session.set_label(&args.label);
    session.set_auto_record(args.record);

    // ── Stdin command loop ────────────────────────────────────────────────────
    // Lines are read on a dedicated OS thread so no StdinLock is held across
    // await points.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.send(l.trim().to_owned()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<(ConnectionState, String)>();
    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel::<ConnectResult>();

    let mut link: Option<Link> = None;
    let mut events: Option<mpsc::Receiver<ImuEvent>> = None;
    let mut connect_requested = true;

    print_help();

    // ── Main loop ─────────────────────────────────────────────────────────────
    loop {
        if connect_requested {
            connect_requested = false;
            if !session.controls().connect {
                warn!("Already {:?}", session.state());
            } else if args.simulate {
                let (rx, sim) = spawn_simulator(args.sim_rate);
                events = Some(rx);
                Link::replace(&mut link, Link::Simulated(sim));
            } else {
                session.on_status(ConnectionState::Discovering, "Requesting Bluetooth Device...");
                let status_tx = status_tx.clone();
                let conn_tx = conn_tx.clone();
                let client = ImuClient::new(config.clone()).with_status_callback(Arc::new(
                    move |state: ConnectionState, msg: &str| {
                        let _ = status_tx.send((state, msg.to_owned()));
                    },
                ));
                tokio::spawn(async move {
                    let result = client.connect().await.map(|(rx, h)| (rx, Link::Ble(h)));
                    let _ = conn_tx.send(result);
                });
            }
        }

        // Status updates are applied before the events they precede.
        tokio::select! {
            biased;

            Some((state, msg)) = status_rx.recv() => {
                session.on_status(state, &msg);
            }

            Some(result) = conn_rx.recv() => match result {
                Ok((rx, l)) => {
                    events = Some(rx);
                    Link::replace(&mut link, l);
                }
                Err(e) => {
                    session.on_status(ConnectionState::Disconnected, &format!("Error: {e}"));
                    error!("{}", session.status());
                }
            },

            event = next_event(&mut events) => match event {
                Some(ImuEvent::Connected(name)) => {
                    session.on_connected(&name);
                    info!("✅  Connected to: {name}");
                    if session.recorder().is_armed() {
                        info!("{}", session.status());
                    }
                }
                Some(ImuEvent::Sample(sample)) => {
                    session.on_sample(sample, now_ms());
                    let text = format_readout(&sample);
                    let fields: Vec<String> = AXIS_NAMES
                        .iter()
                        .zip(text.iter())
                        .map(|(n, v)| format!("{n}={v:>9}"))
                        .collect();
                    let rec = if session.recorder().is_armed() {
                        format!("  ● REC {}", session.recorder().len())
                    } else {
                        String::new()
                    };
                    print!("\r{}{rec}", fields.join("  "));
                    io::stdout().flush().ok();
                }
                Some(ImuEvent::Disconnected) | None => {
                    println!();
                    if let Some(l) = link.take() {
                        l.teardown().await;
                    }
                    events = None;
                    session.on_disconnected();
                    info!("❌  Disconnected from device.");
                    if session.controls().save {
                        info!("Recording of {} samples ready; 's' to save.", session.recorder().len());
                    }
                }
            },

            Some(line) = line_rx.recv() => {
                let (cmd, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
                match cmd {
                    "" => {}
                    "c" => connect_requested = true,
                    "d" => match &link {
                        Some(l) => {
                            if let Err(e) = l.disconnect().await {
                                error!("Disconnect error: {e}");
                            }
                        }
                        None => warn!("Not connected"),
                    },
                    "r" => {
                        if session.toggle_recording() {
                            println!();
                            info!("{}", session.status());
                        }
                    }
                    "l" => {
                        if session.set_label(rest.trim()) {
                            info!("Label set to '{}'", session.label());
                        } else {
                            warn!("Stop recording before changing the label");
                        }
                    }
                    "s" => match session.save(&args.out_dir) {
                        Ok(SaveOutcome::Saved(path)) => info!("Saved {}", path.display()),
                        Ok(SaveOutcome::Alert(msg)) => warn!("{msg}"),
                        Err(e) => error!("Save failed: {e}"),
                    },
                    "q" => {
                        info!("Quit requested.");
                        break;
                    }
                    "h" | "?" => print_help(),
                    other => warn!("Unknown command '{other}'"),
                }
            }
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────
    if let Some(l) = link.take() {
        l.disconnect().await.ok();
        l.teardown().await;
    }
    session.on_disconnected();
    info!("Event loop finished – exiting.");
    Ok(())
}
