mod brent;
mod hermite;

pub(crate) use {brent::brent, hermite::hermite_vector3};
