// Games of chance drawn from the first Quantis device found.
//
// Falls back to the simulated backend when no hardware is attached.
use quantis::sim::{ByteSource, SimulatedBackend};
use quantis::{DeviceType, ModuleMask, Quantis, RandomSource, Result};

fn pick_source() -> Result<Quantis> {
    for device_type in [DeviceType::Usb, DeviceType::Pci] {
        if quantis::count(device_type) > 0 {
            println!("Using {} device 0", device_type);
            return Quantis::new(device_type, 0);
        }
    }
    println!("No Quantis hardware found, using the simulated backend");
    let sim = SimulatedBackend::new(ModuleMask(1))
        .with_byte_source(ByteSource::Lcg { seed: 2004 })
        .leak();
    Ok(Quantis::with_backend(sim, 0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn main() -> Result<()> {
    env_logger::init();
    let mut qrng = pick_source()?;

    println!("Roll (1-100)      : {}", qrng.read_scaled_int(1, 100)?);
    let coin = qrng.read_scaled_int(1, 2)?;
    println!("Coin flip         : {}", if coin == 1 { "heads" } else { "tails" });
    println!("Jackpot (0.01-100): {:.2}", round2(qrng.read_scaled_double(0.01, 100.0)?));
    println!("Wheel (1-25.99)   : {:.2}", round2(qrng.read_scaled_double(1.0, 25.99)?));

    let dice = qrng.read_scaled_int_vec(5, 1, 6)?;
    println!("Five dice         : {:?}", dice);

    let tokens = qrng.read_hex_strings(2, 8)?;
    println!("Tokens            : {}", tokens.join(" "));
    Ok(())
}
