// chamber module
pub mod chamber {
    pub mod constants;
    pub mod rpc;
}

// efficiency module
pub mod efficiency {
    pub mod table;
    pub mod averaging;
}

// algorithm module
pub mod algorithm {
    pub mod combinatorics;
    pub mod resolve;
    pub mod decision;
    pub mod resampling;
}

// data module
pub mod data {
    pub mod hit_pattern;
    pub mod track;
}

pub mod error;
