pub mod pnm;

pub use pnm::{
    decode_pnm, encode_pnm, read_header, read_pnm, write_pnm, PnmFormat, PnmHeader, PnmImage,
};
