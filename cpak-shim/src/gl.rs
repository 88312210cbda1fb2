//! The handful of GL types and enums the upload hooks look at.

#![allow(clippy::upper_case_acronyms)]

pub type GLenum = u32;
pub type GLint = i32;
pub type GLsizei = i32;

pub const GL_TEXTURE_2D: GLenum = 0x0DE1;
pub const GL_RGB: GLenum = 0x1907;
pub const GL_RGBA: GLenum = 0x1908;
pub const GL_UNSIGNED_BYTE: GLenum = 0x1401;
