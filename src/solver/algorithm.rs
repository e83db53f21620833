mod pibt;

pub(crate) use pibt::Pibt;
