mod identifications;

pub use identifications::{
    IDENTIFICATION_COLUMNS,
    read_identifications,
};
