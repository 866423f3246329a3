// src/lib.rs
pub mod io {
    pub mod table_txt;
    pub mod rpc_map;
    pub mod snapshot;
    pub mod events;
}

pub mod analysis {
    pub mod config;
    pub mod counters;
    pub mod pass;
}

pub mod error;
