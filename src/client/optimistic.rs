//! Pure optimistic patches: `(previous, action) -> next`. No I/O, no clock.

use super::cache::{CachedValue, InfinitePosts, QueryKey};
use crate::social::views::PostView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostAction {
    Like,
    Repost,
    Bookmark,
}

impl PostAction {
    /// Shown to the user when the server rejects the action.
    pub fn failure_notice(&self) -> &'static str {
        match self {
            PostAction::Like => "Failed to like post",
            PostAction::Repost => "Failed to repost",
            PostAction::Bookmark => "Failed to bookmark post",
        }
    }
}

/// Flip the caller's flag on one post and move its counter with it.
pub fn toggle_post(post: &PostView, action: PostAction) -> PostView {
    let mut next = post.clone();
    match action {
        PostAction::Like => {
            next.likes += if post.has_liked { -1 } else { 1 };
            next.has_liked = !post.has_liked;
        }
        PostAction::Repost => {
            next.reposts += if post.has_reposted { -1 } else { 1 };
            next.has_reposted = !post.has_reposted;
        }
        PostAction::Bookmark => {
            next.is_bookmarked = !post.is_bookmarked;
        }
    }
    next
}

/// Patch every copy of `post_id` across the loaded pages.
pub fn patch_pages(pages: &InfinitePosts, post_id: i64, action: PostAction) -> InfinitePosts {
    let mut next = pages.clone();
    for page in &mut next.pages {
        for post in &mut page.items {
            if post.id == post_id {
                *post = toggle_post(post, action);
            }
        }
    }
    next
}

/// Bookmark toggle on the bookmarks list: drop the post if listed, otherwise
/// append the last known copy to the last page when it was not yet bookmarked.
pub fn patch_bookmarks(
    pages: &InfinitePosts,
    post_id: i64,
    known: Option<&PostView>,
) -> InfinitePosts {
    let mut next = pages.clone();

    if pages.find(post_id).is_some() {
        for page in &mut next.pages {
            page.items.retain(|post| post.id != post_id);
        }
        return next;
    }

    match (known, next.pages.last_mut()) {
        (Some(post), Some(last)) if !post.is_bookmarked => {
            let mut added = post.clone();
            added.is_bookmarked = true;
            last.items.push(added);
        }
        _ => {}
    }
    next
}

/// Patch one cached view. Views that do not hold the post come back unchanged.
pub fn apply(
    key: &QueryKey,
    value: &CachedValue,
    post_id: i64,
    action: PostAction,
    known: Option<&PostView>,
) -> CachedValue {
    match (key, value) {
        (QueryKey::PostDetail(id), CachedValue::Post(post)) if *id == post_id => {
            CachedValue::Post(toggle_post(post, action))
        }
        (QueryKey::Bookmarks, CachedValue::Pages(pages)) if action == PostAction::Bookmark => {
            CachedValue::Pages(patch_bookmarks(pages, post_id, known))
        }
        (_, CachedValue::Pages(pages)) => CachedValue::Pages(patch_pages(pages, post_id, action)),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::views::{AuthorSummary, PostPage};
    use chrono::{TimeZone, Utc};

    fn post(id: i64) -> PostView {
        PostView {
            id,
            content: format!("post {id}"),
            author: AuthorSummary {
                id: "a".into(),
                name: None,
                username: Some("alice".into()),
                image: None,
            },
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            likes: 0,
            reposts: 0,
            comments_count: 0,
            has_liked: false,
            has_reposted: false,
            is_bookmarked: false,
            hashtags: Vec::new(),
        }
    }

    fn pages(ids: &[&[i64]]) -> InfinitePosts {
        InfinitePosts {
            pages: ids
                .iter()
                .map(|page| PostPage {
                    items: page.iter().map(|id| post(*id)).collect(),
                    next_cursor: None,
                })
                .collect(),
        }
    }

    #[test]
    fn like_twice_is_identity() {
        let original = post(1);
        let once = toggle_post(&original, PostAction::Like);
        assert_eq!(once.likes, 1);
        assert!(once.has_liked);
        assert_eq!(toggle_post(&once, PostAction::Like), original);
    }

    #[test]
    fn unlike_from_server_state() {
        let mut liked = post(1);
        liked.likes = 3;
        liked.has_liked = true;
        let next = toggle_post(&liked, PostAction::Like);
        assert_eq!(next.likes, 2);
        assert!(!next.has_liked);
    }

    #[test]
    fn bookmark_only_flips_flag() {
        let next = toggle_post(&post(1), PostAction::Bookmark);
        assert!(next.is_bookmarked);
        assert_eq!(next.likes, 0);
        assert_eq!(next.reposts, 0);
    }

    #[test]
    fn pages_without_post_are_untouched() {
        let before = pages(&[&[3, 2]]);
        assert_eq!(patch_pages(&before, 9, PostAction::Repost), before);
    }

    #[test]
    fn pages_patch_every_copy() {
        let before = pages(&[&[3, 2], &[2, 1]]);
        let after = patch_pages(&before, 2, PostAction::Repost);
        assert!(after.items().filter(|p| p.id == 2).all(|p| p.has_reposted && p.reposts == 1));
        assert!(after.items().filter(|p| p.id != 2).all(|p| !p.has_reposted));
    }

    #[test]
    fn bookmark_off_removes_from_list() {
        let before = pages(&[&[3, 2], &[1]]);
        let after = patch_bookmarks(&before, 2, None);
        let ids: Vec<i64> = after.items().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn bookmark_on_appends_known_copy_to_last_page() {
        let before = pages(&[&[3], &[1]]);
        let mut known = post(7);
        known.likes = 4;
        let after = patch_bookmarks(&before, 7, Some(&known));

        let last = after.pages.last().unwrap();
        let added = last.items.last().unwrap();
        assert_eq!(added.id, 7);
        assert!(added.is_bookmarked);
        assert_eq!(added.likes, 4);
        assert_eq!(after.pages[0], before.pages[0]);
    }

    #[test]
    fn bookmark_on_without_known_copy_is_noop() {
        let before = pages(&[&[3]]);
        assert_eq!(patch_bookmarks(&before, 7, None), before);

        // Known to be bookmarked already but not loaded in the list: leave it.
        let mut known = post(7);
        known.is_bookmarked = true;
        assert_eq!(patch_bookmarks(&before, 7, Some(&known)), before);
    }

    #[test]
    fn apply_routes_by_key() {
        let detail = CachedValue::Post(post(5));
        let other_detail = apply(&QueryKey::PostDetail(6), &CachedValue::Post(post(6)), 5, PostAction::Like, None);
        assert_eq!(other_detail, CachedValue::Post(post(6)));

        match apply(&QueryKey::PostDetail(5), &detail, 5, PostAction::Like, None) {
            CachedValue::Post(p) => assert!(p.has_liked),
            other => panic!("unexpected {other:?}"),
        }

        // Bookmarking on the feed flips the flag in place rather than adding rows.
        let feed = CachedValue::Pages(pages(&[&[5, 4]]));
        match apply(&QueryKey::Feed, &feed, 5, PostAction::Bookmark, Some(&post(5))) {
            CachedValue::Pages(p) => {
                assert_eq!(p.items().count(), 2);
                assert!(p.find(5).unwrap().is_bookmarked);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
