/*!
 * Block Module
 * Boundary-tag encoding and block geometry
 */

pub mod codec;

pub use codec::{decode, encode};
