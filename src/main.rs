//! Interactive LEDC emulator shell
//!
//! Plays the built-in melodies, single notes and chords through the emulated LEDC
//! peripheral. Without the `streaming` feature (or with `--headless`) every command
//! still drives the channel table, only nothing is audible.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use ledc_sim::melody::MelodyPlayer;
use ledc_sim::notes::note_frequency;
use ledc_sim::tone::{delay_ms, Tone};
use ledc_sim::{Ledc, LedcConfig, Melody, Note, Pin};

/// Second pin used for the chord demo
const CHORD_PIN_OFFSET: Pin = 1;
const CHORD_DURATION_MS: u64 = 1000;

#[derive(Parser)]
#[command(name = "ledc-sim")]
#[command(about = "ESP32 LEDC PWM/tone emulator with real-time audio output")]
struct Args {
    /// GPIO pin the buzzer is connected to
    #[arg(short, long, default_value_t = 25)]
    pin: Pin,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run without opening an audio device
    #[arg(long)]
    headless: bool,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Play a melody from a JSON file and exit
    #[arg(short, long)]
    melody: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn build_ledc(config: LedcConfig, headless: bool) -> ledc_sim::Result<Ledc> {
    if headless {
        return Ledc::headless(config);
    }

    #[cfg(feature = "streaming")]
    {
        Ledc::with_default_output(config)
    }

    #[cfg(not(feature = "streaming"))]
    {
        println!(
            "Audio output requires the \"streaming\" feature. Rebuild with `--features streaming` to hear playback; running headless."
        );
        Ledc::headless(config)
    }
}

fn print_menu(pin: Pin) {
    println!();
    println!("LEDC emulator (buzzer on pin {})", pin);
    println!("================================");
    println!("  1) Startup chime");
    println!("  2) Twinkle Twinkle Little Star");
    println!("  3) Error alert");
    println!("  4) Play a note (e.g. A4, F#5)");
    println!("  5) Chord on two channels");
    println!("  6) Channel status");
    println!("  7) Dump state as JSON");
    println!("  q) Quit");
    print!("> ");
    let _ = io::stdout().flush();
}

/// Parse "A4", "F#5", "Bb3" into a note and octave
fn parse_note(text: &str) -> Result<(Note, u8)> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .with_context(|| format!("missing octave in '{}'", text))?;
    let (name, octave) = text.split_at(split);
    let note = Note::from_name(name).with_context(|| format!("unknown note '{}'", name))?;
    let octave: u8 = octave
        .parse()
        .with_context(|| format!("invalid octave '{}'", octave))?;
    // Reject out-of-range octaves before a channel is attached
    note_frequency(note, octave)?;
    Ok((note, octave))
}

fn prompt(label: &str, lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?),
        None => bail!("input closed"),
    }
}

fn play_note(ledc: &Ledc, pin: Pin, text: &str) -> Result<()> {
    let (note, octave) = parse_note(text)?;
    ledc.attach(pin, 0, ledc.config().tone_resolution)?;
    let played = ledc.write_note(pin, note, octave);
    if let Ok(frequency) = &played {
        println!("{}{} = {} Hz", note, octave, frequency);
        delay_ms(500);
    }
    Tone::new(ledc).no_tone(pin);
    played?;
    Ok(())
}

fn play_chord(ledc: &Ledc, pin: Pin) -> Result<()> {
    let resolution = ledc.config().tone_resolution;
    let second = pin.wrapping_add(CHORD_PIN_OFFSET);
    let tone = Tone::new(ledc);

    tone.tone(pin, 440, None)?;
    if let Err(e) = tone.tone(second, 659, None) {
        tone.no_tone(pin);
        return Err(e.into());
    }
    println!(
        "A4 on pin {} (channel {:?}) + E5 on pin {} (channel {:?}), {}-bit",
        pin,
        ledc.channel_of(pin),
        second,
        ledc.channel_of(second),
        resolution
    );
    delay_ms(CHORD_DURATION_MS);
    tone.no_tone(second);
    tone.no_tone(pin);
    Ok(())
}

fn print_status(ledc: &Ledc) {
    println!("Device: {:?}", ledc.device_state());
    println!("{:>3}  {:>5}  {:>9}  {:>6}  {:>6}  {:>5}", "ch", "pin", "freq", "duty", "max", "phase");
    for snap in ledc.snapshot() {
        if !snap.attached {
            continue;
        }
        let owner = snap
            .owner
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}  {:>5}  {:>9.1}  {:>6}  {:>6}  {:>5.3}",
            snap.index, owner, snap.frequency, snap.duty, snap.resolution_max, snap.phase
        );
    }
    for (pin, channel) in ledc.orphaned_pins() {
        println!("pin {} has a stale route to channel {}", pin, channel);
    }
}

fn run_menu(ledc: &Ledc, pin: Pin) -> Result<()> {
    let player = MelodyPlayer::new(ledc);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_menu(pin);
        let Some(line) = lines.next() else {
            return Ok(());
        };
        let choice = line?;

        let outcome: Result<()> = match choice.trim() {
            "1" => player.play(pin, &Melody::startup()).map_err(Into::into),
            "2" => player.play(pin, &Melody::twinkle()).map_err(Into::into),
            "3" => player.play(pin, &Melody::error_alert()).map_err(Into::into),
            "4" => prompt("Note: ", &mut lines).and_then(|text| play_note(ledc, pin, &text)),
            "5" => play_chord(ledc, pin),
            "6" => {
                print_status(ledc);
                Ok(())
            }
            "7" => serde_json::to_string_pretty(&ledc.snapshot())
                .map(|json| println!("{}", json))
                .map_err(Into::into),
            "q" | "Q" => return Ok(()),
            "" => Ok(()),
            other => {
                println!("Unknown choice: {}", other);
                Ok(())
            }
        };

        if let Err(e) = outcome {
            eprintln!("Error: {:#}", e);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => LedcConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LedcConfig::default(),
    };

    let ledc = build_ledc(config, args.headless)?;

    if let Some(path) = &args.melody {
        let melody = Melody::from_file(path)
            .with_context(|| format!("loading melody {}", path.display()))?;
        MelodyPlayer::new(&ledc).play(args.pin, &melody)?;
        // Let the device drain the last buffer
        std::thread::sleep(Duration::from_millis(100));
        ledc.shutdown();
        return Ok(());
    }

    run_menu(&ledc, args.pin)?;
    ledc.shutdown();
    Ok(())
}
