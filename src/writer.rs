//! Transcoding the emitter's internal UTF-8 buffer to the stream's output
//! encoding and handing it to the configured [`std::io::Write`].

use crate::{Emitter, Encoding, WriterError};

/// Flush the accumulated characters to the output.
pub fn yaml_emitter_flush(emitter: &mut Emitter) -> Result<(), WriterError> {
    assert!(emitter.write_handler.is_some(), "emitter has no output attached");
    assert_ne!(emitter.encoding, Encoding::Any);

    if emitter.buffer.is_empty() {
        return Ok(());
    }

    if emitter.encoding == Encoding::Utf8 {
        let to_emit = emitter.buffer.as_bytes();
        emitter
            .write_handler
            .as_mut()
            .expect("non-null writer")
            .write_all(to_emit)?;
        emitter.buffer.clear();
        return Ok(());
    }

    match emitter.encoding {
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let big_endian = emitter.encoding == Encoding::Utf16Be;
            for unit in emitter.buffer.encode_utf16() {
                let bytes = if big_endian {
                    unit.to_be_bytes()
                } else {
                    unit.to_le_bytes()
                };
                emitter.raw_buffer.extend(bytes);
            }
        }
        Encoding::Utf32Le | Encoding::Utf32Be => {
            let big_endian = emitter.encoding == Encoding::Utf32Be;
            for ch in emitter.buffer.chars() {
                let bytes = if big_endian {
                    (ch as u32).to_be_bytes()
                } else {
                    (ch as u32).to_le_bytes()
                };
                emitter.raw_buffer.extend(bytes);
            }
        }
        Encoding::Any | Encoding::Utf8 => unreachable!("handled above"),
    }

    let to_emit = emitter.raw_buffer.as_slice();
    emitter
        .write_handler
        .as_mut()
        .expect("non-null writer")
        .write_all(to_emit)?;
    emitter.buffer.clear();
    emitter.raw_buffer.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{yaml_emitter_new, yaml_emitter_set_encoding, yaml_emitter_set_output, Encoding};

    use super::yaml_emitter_flush;

    fn flush_str(encoding: Encoding, text: &str) -> Vec<u8> {
        let mut emitter = yaml_emitter_new();
        let mut output = Vec::new();
        yaml_emitter_set_output(&mut emitter, &mut output);
        yaml_emitter_set_encoding(&mut emitter, encoding);
        emitter.buffer.push_str(text);
        yaml_emitter_flush(&mut emitter).unwrap();
        output
    }

    #[test]
    fn utf8_flush_writes_bytes_unchanged() {
        assert_eq!(flush_str(Encoding::Utf8, "ab"), b"ab");
    }

    #[test]
    fn utf32_le_flush_encodes_four_bytes_per_char() {
        let bytes = flush_str(Encoding::Utf32Le, "A");
        assert_eq!(bytes, [0x41, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn utf32_be_flush_encodes_four_bytes_per_char() {
        let bytes = flush_str(Encoding::Utf32Be, "A");
        assert_eq!(bytes, [0x00, 0x00, 0x00, 0x41]);
    }

    #[test]
    fn utf16_le_flush_encodes_two_bytes_per_unit() {
        let bytes = flush_str(Encoding::Utf16Le, "A");
        assert_eq!(bytes, [0x41, 0x00]);
    }
}
