//! SHM Lab entry point
//!
//! On the web the page drives `LabHandle`; this only sets up logging.
//! Natively it runs a short headless session and prints the readouts.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    shm_lab::web::init();
    log::info!("SHM Lab (web) starting...");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("SHM Lab (native) starting...");
    log::info!("Native mode is headless - serve the web build for the interactive lab");

    headless_demo();
}

/// Run the spring from the classroom example for two virtual seconds,
/// snapshot it, then reload the snapshot into a reset session.
#[cfg(not(target_arch = "wasm32"))]
fn headless_demo() {
    use shm_lab::Lab;
    use shm_lab::sim::{ManualFrames, OscillatorKind};

    let frames = ManualFrames::new();
    let mut lab = Lab::in_memory(Box::new(frames.clone()));
    lab.set_oscillator(OscillatorKind::Spring);
    lab.set_parameter("mass", "2");
    lab.set_parameter("springConstant", "50");

    println!("\nSpring: m = 2 kg, k = 50 N/m");
    println!("  period      {:.4} s", lab.simulation().period());

    lab.start();
    let frame_ms = 1000.0 / 60.0;
    let mut now = 0.0;
    while lab.virtual_time() < 2.0 {
        let Some(token) = frames.take() else { break };
        lab.on_frame(token, now);
        now += frame_ms;
    }
    lab.stop();

    let values = lab.current_values();
    println!("  t           {:.3} s", lab.virtual_time());
    println!("  x           {:+.4} m", values.position);
    println!("  v           {:+.4} m/s", values.velocity);
    println!("  E total     {:.4} J", values.energy.total);
    println!("  samples     {}", lab.sample_series().len());

    match lab.save("Demo", "Headless spring run") {
        Ok(id) => {
            lab.reset();
            let restored = lab.load(&id);
            println!("\nSnapshot {id}: reloaded = {restored}, t = {:.3} s", lab.virtual_time());
        }
        Err(e) => println!("\nSnapshot not saved: {e}"),
    }

    lab.set_oscillator(OscillatorKind::Pendulum);
    lab.set_parameter("length", "2");
    lab.set_parameter("gravity", "9.81");
    println!("\nPendulum: L = 2 m, g = 9.81 m/s²");
    println!("  period      {:.4} s", lab.simulation().period());
}
