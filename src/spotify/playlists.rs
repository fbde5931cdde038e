use tokio_util::sync::CancellationToken;

use super::{SpotifyClient, page_limit};
use crate::{
    error::GatewayError,
    types::{Page, Playlist, PlaylistFollowers, PlaylistItem},
};

impl SpotifyClient {
    /// One page of the current user's playlists.
    pub async fn get_playlists_page(
        &self,
        offset: usize,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Playlist>, GatewayError> {
        let path = format!(
            "/me/playlists?limit={limit}&offset={offset}",
            limit = page_limit(limit)
        );
        let page: Page<Playlist> = self.get_cached(path, cancel).await?;
        Ok(page.items)
    }

    /// Follower count of a playlist. Only the listing endpoint's simplified objects lack it.
    pub async fn get_playlist_followers(
        &self,
        playlist_id: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, GatewayError> {
        let path = format!(
            "/playlists/{id}?fields=id,followers(total)",
            id = urlencoding::encode(playlist_id)
        );
        let playlist: PlaylistFollowers = self.get_cached(path, cancel).await?;
        Ok(playlist.followers.total)
    }

    /// One page of a playlist's entries, trimmed to the fields the scoring needs.
    pub async fn get_playlist_items_page(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<PlaylistItem>, GatewayError> {
        let path = format!(
            "/playlists/{id}/tracks?fields=items(added_at,track(id)),total&limit={limit}&offset={offset}",
            id = urlencoding::encode(playlist_id),
            limit = page_limit(limit)
        );
        let page: Page<PlaylistItem> = self.get_cached(path, cancel).await?;
        Ok(page.items)
    }
}
