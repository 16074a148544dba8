use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::warn;

use crate::limits::MAX_FRAME_LEN;
use crate::model::AssignmentRecord;

/// Encode a single record to [len][bincode][crc32] format.
fn encode_record(writer: &mut impl Write, record: &AssignmentRecord) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Write the flat assignment list to `path`.
///
/// Format per record: `[u32: len][bincode: AssignmentRecord][u32: crc32]`.
/// Records go to a temp file which is fsynced and then renamed over `path`,
/// so a crash mid-save leaves the previous snapshot intact.
pub fn save(path: &Path, records: &[AssignmentRecord]) -> io::Result<()> {
    let tmp_path = path.with_extension("snap.tmp");
    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        encode_record(&mut writer, record)?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&tmp_path, path)
}

/// Read every valid record from `path`. A missing file is an empty list.
/// Reading stops at the first truncated or corrupt frame; the valid prefix is kept.
pub fn load(path: &Path) -> io::Result<Vec<AssignmentRecord>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            warn!(
                "snapshot frame of {len} bytes exceeds limit, stopping at record {}",
                records.len()
            );
            break;
        }

        let mut payload = vec![0u8; len];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("snapshot truncated after {} records", records.len());
                break;
            }
            Err(e) => return Err(e),
        }

        let mut crc_buf = [0u8; 4];
        match reader.read_exact(&mut crc_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("snapshot truncated after {} records", records.len());
                break;
            }
            Err(e) => return Err(e),
        }
        if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
            warn!("snapshot checksum mismatch after {} records", records.len());
            break;
        }

        match bincode::deserialize::<AssignmentRecord>(&payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("undecodable snapshot record after {} records: {e}", records.len());
                break;
            }
        }
    }

    Ok(records)
}
