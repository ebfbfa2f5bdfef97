//! Basic visemix example: resolve a rig, schedule an utterance, play it.
//!
//! Usage:
//!   cargo run --example basic
//!   cargo run --example basic -- --text "Peter picked a pepper" --fps 30

use visemix::{AnimationOptions, EngineConfig, Phase, VisemeEngine};

/// A Character-Creator-style rig with a couple of renamed morphs.
const RIG: &[&str] = &[
    "Mouth_Press_L",
    "Mouth_Press_R",
    "V_Explosive",
    "V_Dental_Lip",
    "V_Tongue_Out",
    "Tongue_Up",
    "V_Affricate",
    "V_Lip_Open",
    "V_Wide",
    "V_Open",
    "v_tight_o",
    "V_Tight",
    "Jaw_Open",
];

fn main() -> anyhow::Result<()> {
    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1).peekable();

    let mut text = "Peter picked a peck of pickled peppers.".to_string();
    let mut fps  = 60.0f64;
    let mut wpm  = 150.0f64;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--text" => { if let Some(v) = args.next() { text = v; } }
            "--fps"  => { if let Some(v) = args.next() { fps  = v.parse().unwrap_or(60.0); } }
            "--wpm"  => { if let Some(v) = args.next() { wpm  = v.parse().unwrap_or(150.0); } }
            "--help" => {
                println!("Usage: basic [--text TEXT] [--fps FLOAT] [--wpm FLOAT]");
                return Ok(());
            }
            _ => {}
        }
    }

    // ── Load the rig ─────────────────────────────────────────────────────────
    let mut engine = VisemeEngine::new(EngineConfig::default());
    let report = engine.load_morph_inventory(RIG.iter().copied());

    println!("Resolved:");
    for r in &report.resolved {
        println!("  {:<4} {:<16} → {:<16} ({:?})", r.viseme, r.expected, r.actual, r.strategy);
    }
    println!("Unresolved:");
    for u in &report.unresolved {
        println!("  {:<4} {}", u.viseme, u.expected);
    }

    // ── Schedule ─────────────────────────────────────────────────────────────
    let options = AnimationOptions { words_per_minute: Some(wpm), ..Default::default() };
    let playback = engine.playback(engine.create_animation(&text, &options));
    println!(
        "\n{:?}: {} frames, {:.0} ms",
        text,
        playback.frames().len(),
        playback.total_duration_ms()
    );

    // ── Play ─────────────────────────────────────────────────────────────────
    let tick_ms = 1000.0 / fps.max(1.0);
    let mut t = 0.0;
    loop {
        let running = engine.play_at(&playback, t)?;
        let phase = engine.update()?;
        if let Some(frame) = playback.frame_at(t) {
            let strongest = engine
                .influences()?
                .into_iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .filter(|(_, v)| *v > 0.0);
            if let Some((morph, value)) = strongest {
                println!("{t:>7.1} ms  {:<4} {morph:<14} {value:.2}", frame.viseme);
            }
        }
        if !running && phase == Phase::Idle {
            break;
        }
        t += tick_ms;
    }

    println!("Done!");
    Ok(())
}
