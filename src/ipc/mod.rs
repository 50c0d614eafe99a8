//! Wire protocol between nyfikenc and nyfikend.

pub mod protocol;
