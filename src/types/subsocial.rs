//! Subsocial runtime types.
//!
//! Blogs, posts, comments, reactions and social accounts as the Subsocial
//! runtime stores them. Field order follows the runtime structs.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;

use super::registry::{TypeDef, TypeRegistry};

// ============================================================================
// Registration
// ============================================================================

/// Registers every Subsocial type and validates the bundle.
///
/// # Errors
///
/// Returns [`crate::Error::TypeRegistration`] on a duplicate name or an
/// unresolved field type.
pub fn register_subsocial_types(registry: &mut TypeRegistry) -> Result<()> {
    for (name, def) in subsocial_types() {
        registry.register(name, def)?;
    }
    registry.validate()
}

/// The Subsocial type bundle in registration order.
#[must_use]
pub fn subsocial_types() -> Vec<(&'static str, TypeDef)> {
    vec![
        // Ids and primitives
        ("IpfsHash", TypeDef::alias("Vec<u8>")),
        ("BlogId", TypeDef::alias("u64")),
        ("PostId", TypeDef::alias("u64")),
        ("CommentId", TypeDef::alias("u64")),
        ("ReactionId", TypeDef::alias("u64")),
        ("OptionVecAccountId", TypeDef::alias("Option<Vec<AccountId>>")),
        (
            "Change",
            TypeDef::structure(&[
                ("account", "AccountId"),
                ("block", "BlockNumber"),
                ("time", "Moment"),
            ]),
        ),
        // Blogs
        (
            "Blog",
            TypeDef::structure(&[
                ("id", "BlogId"),
                ("created", "Change"),
                ("updated", "Option<Change>"),
                ("writers", "Vec<AccountId>"),
                ("slug", "Text"),
                ("ipfs_hash", "IpfsHash"),
                ("posts_count", "u16"),
                ("followers_count", "u32"),
                ("edit_history", "Vec<BlogHistoryRecord>"),
                ("score", "i32"),
            ]),
        ),
        (
            "BlogUpdate",
            TypeDef::structure(&[
                ("writers", "OptionVecAccountId"),
                ("slug", "Option<Text>"),
                ("ipfs_hash", "Option<IpfsHash>"),
            ]),
        ),
        (
            "BlogHistoryRecord",
            TypeDef::structure(&[("edited", "Change"), ("old_data", "BlogUpdate")]),
        ),
        // Posts
        (
            "PostExtension",
            TypeDef::data_enum(&[
                ("RegularPost", None),
                ("SharedPost", Some("PostId")),
                ("SharedComment", Some("CommentId")),
            ]),
        ),
        (
            "Post",
            TypeDef::structure(&[
                ("id", "PostId"),
                ("blog_id", "BlogId"),
                ("created", "Change"),
                ("updated", "Option<Change>"),
                ("extension", "PostExtension"),
                ("ipfs_hash", "IpfsHash"),
                ("comments_count", "u16"),
                ("upvotes_count", "u16"),
                ("downvotes_count", "u16"),
                ("shares_count", "u16"),
                ("edit_history", "Vec<PostHistoryRecord>"),
                ("score", "i32"),
            ]),
        ),
        (
            "PostUpdate",
            TypeDef::structure(&[
                ("blog_id", "Option<BlogId>"),
                ("ipfs_hash", "Option<IpfsHash>"),
            ]),
        ),
        (
            "PostHistoryRecord",
            TypeDef::structure(&[("edited", "Change"), ("old_data", "PostUpdate")]),
        ),
        // Comments
        (
            "Comment",
            TypeDef::structure(&[
                ("id", "CommentId"),
                ("parent_id", "Option<CommentId>"),
                ("post_id", "PostId"),
                ("created", "Change"),
                ("updated", "Option<Change>"),
                ("ipfs_hash", "IpfsHash"),
                ("upvotes_count", "u16"),
                ("downvotes_count", "u16"),
                ("shares_count", "u16"),
                ("direct_replies_count", "u16"),
                ("edit_history", "Vec<CommentHistoryRecord>"),
                ("score", "i32"),
            ]),
        ),
        (
            "CommentUpdate",
            TypeDef::structure(&[("ipfs_hash", "IpfsHash")]),
        ),
        (
            "CommentHistoryRecord",
            TypeDef::structure(&[("edited", "Change"), ("old_data", "CommentUpdate")]),
        ),
        // Reactions
        ("ReactionKind", TypeDef::unit_enum(&["Upvote", "Downvote"])),
        (
            "Reaction",
            TypeDef::structure(&[
                ("id", "ReactionId"),
                ("created", "Change"),
                ("updated", "Option<Change>"),
                ("kind", "ReactionKind"),
            ]),
        ),
        // Accounts
        (
            "SocialAccount",
            TypeDef::structure(&[
                ("followers_count", "u32"),
                ("following_accounts_count", "u16"),
                ("following_blogs_count", "u16"),
                ("reputation", "u32"),
                ("profile", "Option<Profile>"),
            ]),
        ),
        (
            "Profile",
            TypeDef::structure(&[
                ("created", "Change"),
                ("updated", "Option<Change>"),
                ("username", "Text"),
                ("ipfs_hash", "IpfsHash"),
                ("edit_history", "Vec<ProfileHistoryRecord>"),
            ]),
        ),
        (
            "ProfileUpdate",
            TypeDef::structure(&[
                ("username", "Option<Text>"),
                ("ipfs_hash", "Option<IpfsHash>"),
            ]),
        ),
        (
            "ProfileHistoryRecord",
            TypeDef::structure(&[("edited", "Change"), ("old_data", "ProfileUpdate")]),
        ),
        (
            "ScoringAction",
            TypeDef::unit_enum(&[
                "UpvotePost",
                "DownvotePost",
                "SharePost",
                "CreateComment",
                "UpvoteComment",
                "DownvoteComment",
                "ShareComment",
                "FollowBlog",
                "FollowAccount",
            ]),
        ),
    ]
}

// ============================================================================
// Tests
// ============================================================================
