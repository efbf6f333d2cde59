//! Convert an OSM XML file to a queryable store, then print a few
//! facts about it. Run with `cargo run --example ingest -- <path.osm>`
//! (after adding an `[[example]]` entry pointing at this file, or
//! copying it under `examples/`, per your workspace layout).
use osm_digest::codec;
use osm_digest::store::{convert, ConvertOptions, Store};
use std::env;
use std::path::PathBuf;

fn main() -> osm_digest::error::Result<()> {
    let input = env::args().nth(1).expect("usage: ingest <path.osm[.gz|.bz2|.xz]>");
    let input = PathBuf::from(input);
    let dest = input.with_extension("sqlite");

    let reader = codec::open(&input)?;
    let report = convert(reader, &dest, ConvertOptions::default())?;
    println!(
        "converted {} primitives ({} tags) into {}",
        report.primitives_processed,
        report.tags_processed,
        dest.display()
    );

    let store = Store::open(&dest)?;
    let header = store.osm()?;
    println!("generator: {}, version: {}", header.generator, header.version);
    Ok(())
}
