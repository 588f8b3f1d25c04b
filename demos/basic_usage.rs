use byteorder::{LittleEndian, WriteBytesExt};
use mea_importer::electrode::MEA60_LABELS;
use mea_importer::{
    AnalogStream, ChannelInfo, DetectionConfig, Experiment, MappedChannelData, PeakSource, Phase,
    PhaseInfo, RecordingContainer, UNIT_SCALE_LEGACY,
};
use std::error::Error;
use std::io::{BufWriter, Write};

const SAMPLES: usize = 100_000;

fn channel_info(channel_id: i32, label: u8) -> ChannelInfo {
    ChannelInfo {
        id: channel_id,
        channel_id,
        row_index: channel_id,
        group_id: 0,
        label: label.to_string(),
        raw_data_type: "Int".to_string(),
        unit: "V".to_string(),
        exponent: -12,
        adc_offset: 0,
        tick: 100,
        conversion_factor: 59605,
        adc_bits: 24,
        highpass_type: String::new(),
        highpass_cutoff: String::new(),
        highpass_order: 0,
        lowpass_type: String::new(),
        lowpass_cutoff: String::new(),
        lowpass_order: 0,
    }
}

/// Writes a 60-channel recording: low noise everywhere, and a spike train on
/// every electrode whose label ends in 7.
fn write_synthetic_table(file: &mut impl Write) -> std::io::Result<()> {
    let mut out = BufWriter::new(file);
    let mut state: u32 = 12345;
    for &label in MEA60_LABELS.iter() {
        for k in 0..SAMPLES {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let mut value = ((state >> 16) % 21) as i32 - 10;
            if label % 10 == 7 && k % 2_000 == 1_000 {
                value = 400;
            } else if label % 10 == 7 && k % 2_000 == 1_001 {
                value = -400;
            }
            out.write_i32::<LittleEndian>(value)?;
        }
    }
    out.flush()
}

fn synthetic_container() -> Result<RecordingContainer, Box<dyn Error>> {
    let mut table = tempfile::NamedTempFile::new()?;
    write_synthetic_table(table.as_file_mut())?;

    let data = MappedChannelData::open(table.path(), MEA60_LABELS.len())?;
    let infos = MEA60_LABELS
        .iter()
        .enumerate()
        .map(|(row, &label)| channel_info(row as i32, label))
        .collect();
    let stream = AnalogStream::new("Stream_0", infos, Box::new(data))?;
    Ok(RecordingContainer::new("synthetic.raw", vec![stream], vec![]))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let container = synthetic_container()?;
    println!("{}", container);

    let stream = container.primary_analog()?;
    let info = stream.channel_info("47")?;
    println!("\nChannel 47:\n{}", info);
    let signal = stream.voltage("47", UNIT_SCALE_LEGACY)?;
    println!("  Duration: {:.3} seconds", signal.duration());
    println!("  First samples:");
    for (i, v) in signal.data.iter().take(5).enumerate() {
        println!("    {}: {:.4} mV", i, v);
    }

    let phase_info = PhaseInfo::new("C1");
    let source = PeakSource::Detection(DetectionConfig::default());
    let phase = Phase::from_container(&container, &phase_info, &source)?;
    println!("\nPhase {}: {}", phase, phase.info());

    let experiment = Experiment::new("C1", "synthetic", "2024-01-01", vec![phase], vec![15])?;
    let phase = &experiment.phases[0];
    println!("Active electrodes with spikes:");
    for (label, rate) in experiment.mean_firing_rate(phase, None)? {
        println!("  {}: {:.2} Hz", label, rate);
    }
    println!(
        "Net firing rate: {:.2} Hz",
        experiment.net_mean_firing_rate(phase, None)?
    );

    Ok(())
}
