use tokio_util::sync::CancellationToken;

use super::{SpotifyClient, page_limit};
use crate::{
    error::GatewayError,
    types::{Artist, Page, TimeRange},
};

impl SpotifyClient {
    /// One page of the user's top artists, including their genre tags.
    pub async fn get_top_artists_page(
        &self,
        time_range: TimeRange,
        offset: usize,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artist>, GatewayError> {
        let path = format!(
            "/me/top/artists?time_range={range}&limit={limit}&offset={offset}",
            range = time_range.as_str(),
            limit = page_limit(limit)
        );
        let page: Page<Artist> = self.get_cached(path, cancel).await?;
        Ok(page.items)
    }
}
