//! Page-level redirects.

use super::Session;
use crate::host::ItemHints;
use crate::scan;

impl Session {
	/// Destination link for a watch or channel page, when redirects are
	/// enabled and the page's item resolves. Goes through the same caches and
	/// resolver as annotations.
	pub async fn redirect_for(&mut self, page_url: &str) -> Option<String> {
		let settings = self.current_settings();
		if !settings.enable_redirect {
			return None;
		}
		let parsed = scan::parse_href(page_url)?;
		let request = scan::normalize(&parsed, &ItemHints::default(), self.reconciler.aliases_mut())?;

		let guard = self.clock.guard();
		let resolutions = match self.resolver.resolve_requests(std::slice::from_ref(&request), &guard).await {
			Ok(resolutions) => resolutions,
			Err(superseded) => {
				tracing::debug!(current = %superseded.current, "redirect.superseded");
				return None;
			}
		};
		let target = resolutions.get(&request.id)?.target()?.clone().with_timestamp(parsed.timestamp);
		let link = settings.target_platform.link(&target);
		tracing::debug!(page = page_url, link = %link, "redirect.resolved");
		Some(link)
	}
}
