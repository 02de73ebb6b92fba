use super::TreeKind;
use crate::storage::raw::Field;

/// Index over every link's `Source`, tie-broken by `Target`.
pub struct SourcesTree;

impl TreeKind for SourcesTree {
    const NAME: &'static str = "sources";
    const KEY: Field = Field::Source;
    const OTHER: Field = Field::Target;
    const LEFT: Field = Field::LeftAsSource;
    const RIGHT: Field = Field::RightAsSource;
    const SIZE: Field = Field::SizeAsSource;
}

/// Index over every link's `Target`, tie-broken by `Source`.
pub struct TargetsTree;

impl TreeKind for TargetsTree {
    const NAME: &'static str = "targets";
    const KEY: Field = Field::Target;
    const OTHER: Field = Field::Source;
    const LEFT: Field = Field::LeftAsTarget;
    const RIGHT: Field = Field::RightAsTarget;
    const SIZE: Field = Field::SizeAsTarget;
}
