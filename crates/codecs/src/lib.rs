#![deny(unsafe_code)]

//! Streaming escape/base64/zstd codecs for the trzsz data plane
//! (`spec.md` §4.2).
//!
//! Each codec is a `Read`/`Write`-oriented pair: an encoder that the sender
//! wraps around its outbound bytes, and a decoder the receiver wraps around
//! its inbound bytes. All three tolerate input chunked arbitrarily across
//! calls, since the underlying terminal stream offers no framing guarantees
//! of its own.

pub mod base64;
pub mod escape;

#[cfg(feature = "zstd")]
pub mod zstd;

pub use base64::{Base64Decoder, Base64Encoder, Base64Error};
pub use escape::{EscapeConfig, EscapeDecoder, EscapeEncoder, EscapeError, EscapeTables};

#[cfg(feature = "zstd")]
pub use zstd::{ZstdDecoder, ZstdEncoder};

#[cfg(test)]
mod matrix {
    //! P1 (round-trip identity) across `{binary, base64} x {compress on,
    //! off} x {escape-all, minimal}` (`spec.md` §8). The compress-on half
    //! of the matrix only compiles with the `zstd` feature, since that is
    //! what gates the codec it needs.

    use std::io::Write;

    use rstest::rstest;

    use crate::base64::{Base64Decoder, Base64Encoder};
    use crate::escape::{EscapeConfig, EscapeDecoder, EscapeEncoder};

    fn sample() -> Vec<u8> {
        let mut data: Vec<u8> = (0u8..=255).collect();
        data.extend_from_slice(b"the quick brown fox\nwith a literal newline\r\nand a marker \xee byte");
        data
    }

    fn encode_decode(input: &[u8], binary: bool, escape_all: bool) -> Vec<u8> {
        let encoded = if binary {
            let config = EscapeConfig { escape_all };
            let mut encoder = EscapeEncoder::new(Vec::new(), config);
            encoder.write_all(input).unwrap();
            encoder.finish()
        } else {
            let mut encoder = Base64Encoder::new(Vec::new());
            encoder.write_all(input).unwrap();
            encoder.finish().unwrap()
        };

        if binary {
            let config = EscapeConfig { escape_all };
            let mut decoder = EscapeDecoder::new(Vec::new(), config);
            decoder.write(&encoded).unwrap();
            decoder.finish().unwrap()
        } else {
            let mut decoder = Base64Decoder::new(Vec::new());
            decoder.write(&encoded).unwrap();
            decoder.finish().unwrap()
        }
    }

    #[rstest]
    #[case(true, true)]
    #[case(true, false)]
    #[case(false, true)]
    #[case(false, false)]
    fn round_trips_without_compression(#[case] binary: bool, #[case] escape_all: bool) {
        let input = sample();
        assert_eq!(encode_decode(&input, binary, escape_all), input);
    }

    #[cfg(feature = "zstd")]
    #[rstest]
    #[case(true, true)]
    #[case(true, false)]
    #[case(false, true)]
    #[case(false, false)]
    fn round_trips_with_compression(#[case] binary: bool, #[case] escape_all: bool) {
        use crate::zstd::{ZstdDecoder, ZstdEncoder};

        let input = sample();

        let mut compressor = ZstdEncoder::new(Vec::new(), crate::zstd::DEFAULT_LEVEL).unwrap();
        compressor.write_all(&input).unwrap();
        let compressed = compressor.finish().unwrap();

        let round_tripped = encode_decode(&compressed, binary, escape_all);

        let mut decompressor = ZstdDecoder::new(Vec::new()).unwrap();
        decompressor.write_all(&round_tripped).unwrap();
        let decompressed = decompressor.finish().unwrap();

        assert_eq!(decompressed, input);
    }
}
