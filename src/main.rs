use active_probe::config::ProbeConfig;
use active_probe::host::sim::{MethodDef, SimHost};
use active_probe::host::{HostError, ParamInfo, Value, ValueKind, Vec3};
use active_probe::kernel::event::{Action, Event};
use active_probe::kernel::time::SystemClock;
use active_probe::Reactor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Config
    let path = std::env::var_os("ACTIVE_PROBE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("probe.toml"));
    let config = ProbeConfig::load_or_default(&path)?;
    let keys = config.keys.clone();
    tracing::info!("Active probe booting (config: {})", path.display());

    // 3. Host + Reactor. Attach runs on this thread, which stays the main thread.
    let host = Arc::new(demo_world()?);
    let (tx, rx) = mpsc::channel(100);
    let mut reactor = Reactor::attach(host.clone(), config, Arc::new(SystemClock::new()), rx);

    // 4. A host worker thread calling an RPC off the main thread
    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        let host = host.clone();
        let running = running.clone();
        std::thread::spawn(move || {
            let mut goal = 0;
            while running.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_secs(2));
                goal += 1000;
                for ep in host.objects_of_type("ExtractionPoint") {
                    let _ = host.call(&ep, "HaulGoalSetRPC", &[Value::Int(goal)]);
                }
            }
        })
    };

    // 5. Spawn Input Reader (Stdin)
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();

        println!(
            "Keys: {}=mark {}=ButtonPress {}=OnClick {}=toggle trace; 'scene' rebuilds, 'quit' detaches.",
            keys.mark, keys.force_button_press, keys.force_on_click, keys.trace_toggle
        );

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.eq_ignore_ascii_case("quit") {
                break;
            }
            let event = if line.eq_ignore_ascii_case("scene") {
                Event::ContextChanged
            } else if let Some(action) = keys.action_for(line).or_else(|| Action::parse(line)) {
                Event::Action(action)
            } else {
                tracing::warn!("Unknown input: '{}'", line);
                continue;
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    // 6. Run until the input side hangs up
    reactor.run().await;

    running.store(false, Ordering::Relaxed);
    let _ = worker.join();
    Ok(())
}

/// A small host resembling the game the probe was written against.
fn demo_world() -> Result<SimHost, HostError> {
    let host = SimHost::new("2022.3.21f1");

    let camera = host.add_type("UnityEngine.CoreModule", "UnityEngine", "Camera");
    host.add_method(camera, MethodDef::new("Render"))?;

    let ep = host.add_type("Assembly-CSharp", "", "ExtractionPoint");
    host.add_method(
        ep,
        MethodDef::new("OnClick").body(|host, obj, _| host.call(obj, "ButtonPress", &[])),
    )?;
    host.add_method(
        ep,
        MethodDef::new("ButtonPress")
            .body(|host, obj, _| host.call(obj, "StateSet", &[Value::Int(2)])),
    )?;
    host.add_method(
        ep,
        MethodDef::new("StateSet")
            .non_public()
            .params(vec![ParamInfo::value("state", "State", ValueKind::Int)]),
    )?;
    host.add_method(
        ep,
        MethodDef::new("StateSetRPC")
            .non_public()
            .params(vec![ParamInfo::value("state", "State", ValueKind::Int)]),
    )?;
    host.add_method(
        ep,
        MethodDef::new("HaulGoalSetRPC")
            .params(vec![ParamInfo::value("value", "Int32", ValueKind::Int)]),
    )?;
    host.add_method(ep, MethodDef::new("ButtonDenyRPC").non_public())?;
    host.add_method(ep, MethodDef::new("get_IsActive").special_name())?;

    let map = host.add_type("Assembly-CSharp", "", "MapToolController");
    host.add_method(map, MethodDef::new("Update").non_public())?;
    host.add_method(
        map,
        MethodDef::new("ShowMarker")
            .params(vec![ParamInfo::value("position", "Vector3", ValueKind::Vector3)]),
    )?;

    let money = host.add_type("Assembly-CSharp", "", "CurrencyUI");
    host.add_method(
        money,
        MethodDef::new("SetMoney").params(vec![ParamInfo::value("amount", "Int32", ValueKind::Int)]),
    )?;

    let player = host.add_type("Assembly-CSharp", "", "PlayerController");
    host.add_method(
        player,
        MethodDef::new("Move").params(vec![
            ParamInfo::value("direction", "Vector3", ValueKind::Vector3),
            ParamInfo::value("speed", "Single", ValueKind::Float),
        ]),
    )?;

    host.spawn(ep, "Extraction Point (Truck)", Vec3::new(0.0, 0.0, 12.0));
    host.spawn(ep, "Extraction Point (Lobby)", Vec3::new(4.0, 0.0, 3.0));
    host.spawn(ep, "Extraction Point (Cellar)", Vec3::new(-20.0, -4.0, 8.0));
    host.set_camera(Some(Vec3::new(0.0, 1.6, 0.0)));
    Ok(host)
}
