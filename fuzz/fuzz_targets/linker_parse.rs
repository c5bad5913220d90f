use honggfuzz::fuzz;

use linker::{Codec, Environment, FixedClock};

fn main() {
    let codec = Codec::with_clock(Environment::default(), FixedClock(0));
    loop {
        fuzz!(|data: &str| {
            codec.parse_linker(data);
            linker::codec::deserialize(data);
        });
    }
}
