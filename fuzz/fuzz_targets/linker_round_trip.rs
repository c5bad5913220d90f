use honggfuzz::fuzz;

use linker::{Codec, Environment, FixedClock, IdMap};

fn main() {
    let codec = Codec::with_clock(Environment::new("fuzz", 0, "en"), FixedClock(0));
    loop {
        fuzz!(|data: &str| {
            let ids = IdMap::from([("cid", data), ("_ga", data)]);
            let value = codec.create_linker(1, &ids);
            assert_eq!(codec.parse_linker(&value).unwrap(), ids);
        });
    }
}
