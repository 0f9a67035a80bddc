use std::fmt;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::Deref;

use bytemuck::{Pod, Zeroable};
use merkle_light::hash::{Algorithm, Hashable};
use merkle_light::{merkle, proof};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Merkle tree for use as a vector commitment over elements of the specified type.
pub struct MerkleTree<Element>
where
    Element: Hashable<ShaHasher>,
{
    inner: merkle::MerkleTree<Node, ShaHasher>,
    phantom_elem: PhantomData<Element>,
}

impl<Element> MerkleTree<Element>
where
    Element: Hashable<ShaHasher>,
{
    pub fn new(elements: &[Element]) -> Self {
        merkle::MerkleTree::<Node, ShaHasher>::from_data(elements).into()
    }

    pub fn prove(&self, i: usize) -> Proof<Element> {
        self.gen_proof(i).into()
    }
}

impl<Element> Deref for MerkleTree<Element>
where
    Element: Hashable<ShaHasher>,
{
    type Target = merkle::MerkleTree<Node, ShaHasher>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<Element> From<merkle::MerkleTree<Node, ShaHasher>> for MerkleTree<Element>
where
    Element: Hashable<ShaHasher>,
{
    fn from(inner: merkle::MerkleTree<Node, ShaHasher>) -> Self {
        Self {
            inner,
            phantom_elem: PhantomData,
        }
    }
}

/// Opening of a single committed element against a tree root.
pub struct Proof<Element>
where
    Element: Hashable<ShaHasher>,
{
    inner: proof::Proof<Node>,
    phantom_elem: PhantomData<Element>,
}

impl<Element> Proof<Element>
where
    Element: Hashable<ShaHasher>,
{
    pub fn verify(&self, root: &Node, element: &Element) -> bool {
        // Check that the root of the proof matches the provided root.
        if &self.root() != root {
            return false;
        }

        // Check that the path from the leaf matches the root.
        if !self.validate::<ShaHasher>() {
            return false;
        }

        // Check the element hashes to the leaf in the proof. The leaf is the
        // hash of the element's hash under the leaf prefix.
        let algorithm = &mut ShaHasher::default();
        element.hash(algorithm);
        let elem_hash = algorithm.hash();

        algorithm.reset();
        let leaf_hash = algorithm.leaf(elem_hash);

        leaf_hash == self.item()
    }
}

impl<Element> Deref for Proof<Element>
where
    Element: Hashable<ShaHasher>,
{
    type Target = proof::Proof<Node>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<Element> From<proof::Proof<Node>> for Proof<Element>
where
    Element: Hashable<ShaHasher>,
{
    fn from(inner: proof::Proof<Node>) -> Self {
        Self {
            inner,
            phantom_elem: PhantomData,
        }
    }
}

/// A SHA2-256 digest with the trait implementations needed to act as a node
/// in the merkle_light package.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Pod, Zeroable, Deserialize,
    Serialize,
)]
#[repr(transparent)]
pub struct Node([u8; 32]);

const_assert_eq!(size_of::<Node>(), 32);

impl Node {
    /// Digest a byte string into a node with plain SHA2-256.
    pub fn digest(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Node {
    fn as_ref(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl From<[u8; 32]> for Node {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// ShaHasher streams written bytes into SHA2-256 and implements the Algorithm
/// trait for use with the merkle_light package.
#[derive(Default)]
pub struct ShaHasher(Sha256);

// NOTE: The Hasher trait is really designed for use with hashmaps and is quite
// ill-suited as an interface for use by merkle_light. Only write is used.
impl Hasher for ShaHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        unimplemented!("finish is not implemented for merkletree hashers");
    }
}

impl Algorithm<Node> for ShaHasher {
    fn hash(&mut self) -> Node {
        Node(self.0.finalize_reset().into())
    }
}
