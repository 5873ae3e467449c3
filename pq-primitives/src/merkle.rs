use itertools::Itertools;

use crate::{
    error::{DeserializationError, PqError, Result},
    hash::{SymmetricPrimitive, DOMAIN_NODE},
    wots::Digest,
};

/// Complete binary hash tree, stored level by level from the leaves up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest>>,
}

pub(crate) fn hash_node<H: SymmetricPrimitive>(left: &Digest, right: &Digest) -> Digest {
    H::hash(&[DOMAIN_NODE, left, right])
}

impl MerkleTree {
    /// The number of leaves must be a nonzero power of two.
    pub fn from_leaves<H: SymmetricPrimitive>(leaves: Vec<Digest>) -> Result<Self> {
        if !leaves.len().is_power_of_two() {
            return Err(PqError::InvalidParameters(
                "Merkle tree needs a power-of-two number of leaves",
            ));
        }
        Ok(Self::build::<H>(leaves))
    }

    pub(crate) fn build<H: SymmetricPrimitive>(leaves: Vec<Digest>) -> Self {
        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let parents = level
                .iter()
                .tuples()
                .map(|(left, right)| hash_node::<H>(left, right))
                .collect_vec();
            levels.push(parents);
        }
        Self { levels }
    }

    pub fn root(&self) -> Digest {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn height(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    pub fn leaf(&self, index: usize) -> Option<&Digest> {
        self.levels[0].get(index)
    }

    /// Sibling of every node on the path from leaf `index` to the root,
    /// bottom up.
    pub fn authentication_path(&self, index: u32) -> Result<Vec<Digest>> {
        if index as usize >= self.leaf_count() {
            return Err(DeserializationError::InvalidLeafIndex {
                index,
                capacity: self.leaf_count() as u64,
            }
            .into());
        }
        let path = self.levels[..self.height()]
            .iter()
            .enumerate()
            .map(|(depth, level)| level[((index as usize) >> depth) ^ 1])
            .collect_vec();
        Ok(path)
    }
}

/// Climb from `leaf` at position `index` to the root along `path`.
pub fn root_from_path<H: SymmetricPrimitive>(leaf: Digest, index: u32, path: &[Digest]) -> Digest {
    path.iter()
        .enumerate()
        .fold(leaf, |node, (depth, sibling)| {
            if (index >> depth) & 1 == 0 {
                hash_node::<H>(&node, sibling)
            } else {
                hash_node::<H>(sibling, &node)
            }
        })
}
