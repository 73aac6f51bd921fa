//! Anonymous-board identity masking
//!
//! Applied identically to single-post fetches, post listings and
//! notification payloads.

use crate::models::{Board, Post};

/// Shape `post` for a viewer. `admin` is whether the viewer administers `board`.
pub fn mask_post(board: &Board, mut post: Post, admin: bool) -> Post {
    let Some(anonymous) = board.anonymous_name.as_deref() else {
        return post;
    };

    if admin {
        // spoofed_name holds the name the post was written under
        post.spoofed_name = format!("{anonymous} ({})", post.spoofed_name);
    } else {
        post.spoofed_name = anonymous.to_owned();
        post.character_id = None;
        post.character_name = None;
    }
    post
}
