//! Integration tests for the ttyrec codec: encode/decode round trips and
//! frame-indexed seeking.

use std::io::{Cursor, Seek, SeekFrom, Write};
use std::time::Duration;

use proptest::prelude::*;
use ttyrec::{Decoder, Encoder, Error, SeekWhence, TimeVal};

const WRITE_DELAY: Duration = Duration::from_millis(50);
const WRITE_DELAY_SPLAY: Duration = Duration::from_millis(10);

/// Encode each part as one frame, with no delay between writes.
fn record(parts: &[&[u8]]) -> Vec<u8> {
    let mut encoder = Encoder::new(Vec::new());
    for part in parts {
        encoder.write(part).unwrap();
    }
    encoder.into_inner()
}

#[test]
fn round_trip_preserves_chunks_and_timing() {
    let parts: &[&[u8]] = &[b"this", b"is", b"a", b"test"];
    let mut encoder = Encoder::new(Vec::new());
    for part in parts {
        let n = encoder.write(part).unwrap();
        assert_eq!(n, part.len(), "write reports payload bytes, not header");
        std::thread::sleep(WRITE_DELAY);
    }

    let buf = encoder.into_inner();
    let mut decoder = Decoder::new(buf.as_slice());
    let (frames, _stop) = decoder.decode_stream();

    let mut previous: Option<TimeVal> = None;
    let mut index = 0;
    for frame in frames {
        let frame = frame.unwrap();
        assert_eq!(frame.data, parts[index], "frame {index}");

        if let Some(prev) = previous {
            let delay = frame.time.sub(prev);
            assert!(
                delay >= WRITE_DELAY - WRITE_DELAY_SPLAY,
                "frame {index} arrived after {delay:?}, expected at least {WRITE_DELAY:?} - {WRITE_DELAY_SPLAY:?}"
            );
            // Generous upper bound so a loaded test host does not flake.
            assert!(
                delay < Duration::from_secs(5),
                "frame {index} arrived after {delay:?}"
            );
        }
        previous = Some(frame.time);
        index += 1;
    }
    assert_eq!(index, parts.len(), "all frames read back");
}

#[test]
fn seek_jumps_compose_and_round_trip() {
    // 200 single-byte frames so relative jumps have room.
    let parts: Vec<Vec<u8>> = (0..200u8).map(|i| vec![i]).collect();
    let refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
    let buf = record(&refs);

    let mut decoder = Decoder::new(Cursor::new(buf));

    // Read the first frame and remember the byte offset just after it.
    decoder.decode_frame().unwrap();
    let first_pos = decoder_pos(&mut decoder);
    let mut want: i64 = 1;

    // Jump around!
    for offset in [42, -23, 0, 111, -131] {
        decoder.seek_to_frame(offset, SeekWhence::Current).unwrap();
        want += offset;
        assert_eq!(decoder.frame() as i64, want, "after relative seek {offset}");
    }
    assert_eq!(want, 0, "offsets sum back to the start");

    // Reading the first frame again lands on the recorded byte offset.
    let frame = decoder.decode_frame().unwrap();
    assert_eq!(frame.data, [0u8]);
    assert_eq!(decoder_pos(&mut decoder), first_pos);

    // An absolute seek to frame 1 repositions identically.
    decoder.decode_frame().unwrap();
    decoder.seek_to_frame(1, SeekWhence::Start).unwrap();
    assert_eq!(decoder.frame(), 1);
    assert_eq!(decoder_pos(&mut decoder), first_pos);
}

#[test]
fn illegal_seeks_do_not_move_the_decoder() {
    let buf = record(&[b"a", b"b", b"c"]);
    let mut decoder = Decoder::new(Cursor::new(buf));
    decoder.decode_frame().unwrap();
    let pos = decoder_pos(&mut decoder);

    assert!(matches!(
        decoder.seek_to_frame(-1, SeekWhence::Start).unwrap_err(),
        Error::IllegalSeek
    ));
    assert!(matches!(
        decoder.seek_to_frame(-1, SeekWhence::End).unwrap_err(),
        Error::IllegalSeek
    ));

    assert_eq!(decoder.frame(), 1);
    assert_eq!(decoder_pos(&mut decoder), pos);
}

#[test]
fn seek_to_end_positions_after_last_frame() {
    let buf = record(&[b"a", b"b", b"c"]);
    let mut decoder = Decoder::new(Cursor::new(buf));
    decoder.seek_to_frame(0, SeekWhence::End).unwrap();
    assert_eq!(decoder.frame(), 3);
    assert!(matches!(
        decoder.decode_frame().unwrap_err(),
        Error::EndOfStream
    ));
}

#[test]
fn seek_past_end_fails_with_end_of_stream() {
    let buf = record(&[b"a", b"b"]);
    let mut decoder = Decoder::new(Cursor::new(buf));
    assert!(matches!(
        decoder.seek_to_frame(5, SeekWhence::Start).unwrap_err(),
        Error::EndOfStream
    ));
}

/// Byte offset of the decoder's underlying cursor, without moving it.
fn decoder_pos(decoder: &mut Decoder<Cursor<Vec<u8>>>) -> u64 {
    decoder.get_mut().seek(SeekFrom::Current(0)).unwrap()
}

proptest! {
    /// Decomposing a duration into a TimeVal and recomposing it by
    /// subtracting the zero TimeVal yields the duration back, at
    /// microsecond granularity.
    #[test]
    fn timeval_round_trips_durations(micros in 0u64..=u64::from(u32::MAX) * 1_000_000) {
        let duration = Duration::from_micros(micros);
        let tv = TimeVal::from(duration);
        prop_assert_eq!(tv.sub(TimeVal::default()), duration);
    }
}
