use crate::sequence::Sequence;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{line_ending, not_line_ending, space1},
    combinator::{eof, map, opt},
    sequence::preceded,
    IResult,
};
use phylopipe_core::{PhyloError, PhyloResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Residues per line when writing
const LINE_WIDTH: usize = 60;

/// Parse a FASTA header line
fn parse_header(input: &[u8]) -> IResult<&[u8], (&str, Option<&str>)> {
    let (input, _) = tag(b">")(input)?;
    let (input, id) = map(
        take_till(|c: u8| c == b' ' || c == b'\t' || c == b'\n' || c == b'\r'),
        |s| std::str::from_utf8(s).unwrap_or(""),
    )(input)?;
    let (input, description) = opt(preceded(
        space1,
        map(not_line_ending, |s| std::str::from_utf8(s).unwrap_or("")),
    ))(input)?;
    let (input, _) = alt((line_ending, eof))(input)?;
    Ok((input, (id, description)))
}

/// Parse sequence lines until next header or EOF
fn parse_sequence(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let mut sequence = Vec::new();
    let mut remaining = input;

    while !remaining.is_empty() && remaining[0] != b'>' {
        let (rest, line) =
            take_till::<_, _, nom::error::Error<_>>(|c: u8| c == b'\n' || c == b'\r')(remaining)?;
        let (rest, _) = opt(line_ending)(rest)?;
        // A lone '\r' without '\n'
        let rest = rest.strip_prefix(b"\r").unwrap_or(rest);

        // ';' starts a comment line in old-style FASTA
        if line.first() != Some(&b';') {
            sequence.extend(
                line.iter()
                    .filter(|c| !c.is_ascii_whitespace())
                    .map(|c| c.to_ascii_uppercase()),
            );
        }
        remaining = rest;
    }

    Ok((remaining, sequence))
}

/// Parse FASTA from bytes
pub fn parse_fasta_from_bytes(data: &[u8]) -> PhyloResult<Vec<Sequence>> {
    let mut sequences = Vec::new();
    let mut remaining = data;

    loop {
        // Skip blank lines between records
        let start = remaining
            .iter()
            .position(|c| !c.is_ascii_whitespace())
            .unwrap_or(remaining.len());
        remaining = &remaining[start..];

        if remaining.is_empty() {
            break;
        }

        if remaining[0] != b'>' {
            return Err(PhyloError::parse(format!(
                "expected '>' at start of FASTA record {}",
                sequences.len() + 1
            )));
        }

        let (rest, (id, description)) = parse_header(remaining)
            .map_err(|_| PhyloError::parse("failed to parse FASTA header"))?;
        if id.is_empty() {
            return Err(PhyloError::parse(format!(
                "FASTA record {} has an empty identifier",
                sequences.len() + 1
            )));
        }

        let (rest, residues) = parse_sequence(rest)
            .map_err(|_| PhyloError::parse(format!("failed to parse sequence of '{}'", id)))?;

        let mut seq = Sequence::new(id.to_string(), residues);
        if let Some(desc) = description.map(str::trim).filter(|d| !d.is_empty()) {
            seq = seq.with_description(desc.to_string());
        }
        sequences.push(seq);
        remaining = rest;
    }

    Ok(sequences)
}

/// Read all records of a FASTA file
pub fn parse_fasta<P: AsRef<Path>>(path: P) -> PhyloResult<Vec<Sequence>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let sequences = parse_fasta_from_bytes(&data)
        .map_err(|e| PhyloError::parse(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), records = sequences.len(), "read FASTA");
    Ok(sequences)
}

pub fn write_fasta<P: AsRef<Path>>(path: P, sequences: &[Sequence]) -> PhyloResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_fasta_to_writer(&mut writer, sequences)?;
    writer.flush()?;
    Ok(())
}

/// Write records with wrapped sequence lines
pub fn write_fasta_to_writer<W: Write>(writer: &mut W, sequences: &[Sequence]) -> PhyloResult<()> {
    for seq in sequences {
        writeln!(writer, "{}", seq.header())?;
        for chunk in seq.sequence.chunks(LINE_WIDTH) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}
