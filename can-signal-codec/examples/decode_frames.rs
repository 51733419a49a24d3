// Decode a short multiplexed frame sequence and print every new sample
//
// Run with: RUST_LOG=debug cargo run --example decode_frames

use can_signal_codec::{
    ByteOrder, CanFrame, ExtendedMux, Message, SampleObserver, Signal, SignalDefinition, ValueKind,
};
use std::sync::Arc;

struct Printer;

impl SampleObserver for Printer {
    fn on_sample(&self, signal: &Signal) {
        let value = signal.engineering_text().unwrap_or_else(|e| e.to_string());
        println!(
            "  0x{:03X} {:<14} = {} {}",
            signal.sample_can_id(),
            signal.name(),
            value,
            signal.unit().unwrap_or("")
        );
    }
}

fn main() -> can_signal_codec::Result<()> {
    env_logger::init();

    let mut message = Message::new(0x1F0, "BatteryStatus", 8).with_sender("BMS");
    message.add_signal(
        SignalDefinition::new("Page", 0, 8)
            .with_value_kind(ValueKind::Unsigned)
            .as_multiplexor(),
    )?;
    message.add_signal(
        SignalDefinition::new("PackVoltage", 15, 16)
            .with_byte_order(ByteOrder::BigEndian)
            .with_value_kind(ValueKind::Unsigned)
            .with_scaling(0.01, 0.0)
            .with_unit("V")
            .multiplexed_by(0),
    )?;
    message.add_signal(
        SignalDefinition::new("CellTemp", 8, 8)
            .with_scaling(1.0, -40.0)
            .with_unit("degC")
            .extended_multiplexed_by(ExtendedMux::new("Page").with_range(1, 4)),
    )?;
    message.add_signal(
        SignalDefinition::new("Contactor", 24, 2)
            .with_value_kind(ValueKind::Unsigned)
            .with_enum(0, "Open")
            .with_enum(1, "Precharge")
            .with_enum(2, "Closed"),
    )?;

    let printer: Arc<dyn SampleObserver> = Arc::new(Printer);
    for signal in message.signals_mut() {
        signal.attach_observer(&printer);
    }

    let frames = [
        CanFrame::new(0x1F0, message.encode(&[("Page", 0.0), ("PackVoltage", 398.52), ("Contactor", 2.0)])?, 1_000_000),
        CanFrame::new(0x1F0, vec![0x03, 0x41, 0x00, 0x01, 0, 0, 0, 0], 2_000_000),
        CanFrame::new(0x1F0, vec![0x07, 0x41, 0x00, 0x00, 0, 0, 0, 0], 3_000_000),
    ];

    for frame in &frames {
        println!("Frame {:02X?}", frame.data);
        let updated = message.parse_frame(frame);
        println!("  {} signals updated", updated);
    }

    Ok(())
}
