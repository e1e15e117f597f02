use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

/// One page of a listed collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub results: Vec<T>,
}

/// Page-number pagination parameters, applied to an already filtered and
/// ordered collection.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn apply<T>(&self, collection: Vec<T>) -> Page<T> {
        let count = collection.len();
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE) as usize;
        let page = self.page.unwrap_or(1).max(1) as usize;

        let results = collection
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Page { count, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<u32>, per_page: Option<u32>) -> PageParams {
        PageParams { page, per_page }
    }

    #[test]
    fn default_page_is_first_ten() {
        let page = params(None, None).apply((0..25).collect::<Vec<_>>());

        assert_eq!(page.count, 25);
        assert_eq!(page.results, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn second_page_continues_where_first_ended() {
        let page = params(Some(2), Some(10)).apply((0..25).collect::<Vec<_>>());

        assert_eq!(page.count, 25);
        assert_eq!(page.results, (10..20).collect::<Vec<_>>());
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = params(Some(9), Some(10)).apply((0..5).collect::<Vec<_>>());

        assert_eq!(page.count, 5);
        assert!(page.results.is_empty());
    }

    #[test]
    fn per_page_is_clamped() {
        let page = params(None, Some(100_000)).apply((0..200).collect::<Vec<_>>());
        assert_eq!(page.results.len(), MAX_PER_PAGE as usize);

        let page = params(None, Some(0)).apply((0..5).collect::<Vec<_>>());
        assert_eq!(page.results.len(), 1);
    }
}
