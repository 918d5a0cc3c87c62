//! Draining paged remote listings
//!
//! Two listing shapes exist at the client boundary: cursor paging, where each
//! page carries an opaque continuation token, and load-all handles that fetch
//! everything eagerly. Both reduce to the same thing here: a finite `Vec<T>`
//! in remote order. Collection is all-or-nothing; an error on any page
//! discards what was already collected.

use serde::{Deserialize, Serialize};

/// One page of a remote listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` on the last page
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self { items, next }
    }

    /// A final page
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Collect every item of a cursor-paged listing, in order
///
/// Calls `fetch_next` with each continuation token until a page comes back
/// without one. Items are neither deduplicated nor re-sorted.
pub fn collect_all<T, E, F, N>(fetch_first: F, mut fetch_next: N) -> Result<Vec<T>, E>
where
    F: FnOnce() -> Result<Page<T>, E>,
    N: FnMut(&str) -> Result<Page<T>, E>,
{
    let mut page = fetch_first()?;
    let mut all = Vec::with_capacity(page.items.len());

    loop {
        all.append(&mut page.items);
        match page.next.take() {
            Some(token) => page = fetch_next(&token)?,
            None => return Ok(all),
        }
    }
}

/// Collect a load-all listing into the same shape as [`collect_all`]
pub fn collect_eager<T, E, I, F>(load_all: F) -> Result<Vec<T>, E>
where
    F: FnOnce() -> Result<I, E>,
    I: IntoIterator<Item = T>,
{
    Ok(load_all()?.into_iter().collect())
}

/// Lazy, one-shot iterator over a cursor-paged listing
///
/// Yields items in remote order, fetching pages on demand. After the first
/// error or the last page it yields nothing more; to start over, build a new
/// pager.
pub struct Pager<T, E, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    fetch: F,
    buffer: std::vec::IntoIter<T>,
    next: Option<String>,
    started: bool,
    done: bool,
}

impl<T, E, F> Pager<T, E, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    /// `fetch(None)` loads the first page, `fetch(Some(token))` the rest
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            buffer: Vec::new().into_iter(),
            next: None,
            started: false,
            done: false,
        }
    }
}

impl<T, E, F> Iterator for Pager<T, E, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            if self.done || (self.started && self.next.is_none()) {
                return None;
            }

            let token = self.next.take();
            self.started = true;
            match (self.fetch)(token.as_deref()) {
                Ok(page) => {
                    self.next = page.next;
                    self.buffer = page.items.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn pages() -> Vec<Page<i32>> {
        vec![
            Page::new(vec![1, 2], Some("t1".into())),
            Page::new(vec![3], Some("t2".into())),
            Page::last(vec![4, 5]),
        ]
    }

    fn serve(token: &str) -> Result<Page<i32>, String> {
        let pages = pages();
        match token {
            "t1" => Ok(pages[1].clone()),
            "t2" => Ok(pages[2].clone()),
            other => Err(format!("bad token {other}")),
        }
    }

    #[test]
    fn test_collect_all_concatenates_in_order() {
        let result = collect_all(|| Ok(pages()[0].clone()), serve).unwrap();
        assert_eq!(result, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_collect_all_single_page() {
        let result: Vec<i32> =
            collect_all(|| Ok::<_, String>(Page::last(vec![7, 7])), |_| unreachable!()).unwrap();
        assert_eq!(result, vec![7, 7]);
    }

    #[test]
    fn test_collect_all_keeps_duplicates_and_order() {
        let result = collect_all(
            || Ok::<_, String>(Page::new(vec![3, 1], Some("a".into()))),
            |_| Ok(Page::last(vec![1, 2])),
        )
        .unwrap();
        assert_eq!(result, vec![3, 1, 1, 2]);
    }

    #[test]
    fn test_collect_all_error_discards_partial() {
        let calls = RefCell::new(Vec::new());
        let result: Result<Vec<i32>, String> = collect_all(
            || Ok(Page::new(vec![1, 2], Some("t1".into()))),
            |token| {
                calls.borrow_mut().push(token.to_string());
                Err("throttled".to_string())
            },
        );
        assert_eq!(result.unwrap_err(), "throttled");
        assert_eq!(calls.into_inner(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_collect_eager() {
        let result: Result<Vec<&str>, String> = collect_eager(|| Ok(vec!["a", "b"]));
        assert_eq!(result.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_pager_yields_lazily() {
        let fetched = RefCell::new(0);
        let pager = Pager::new(|token: Option<&str>| {
            *fetched.borrow_mut() += 1;
            match token {
                None => Ok(pages()[0].clone()),
                Some(t) => serve(t),
            }
        });

        let first_two: Vec<i32> = pager.take(2).map(Result::unwrap).collect();
        assert_eq!(first_two, vec![1, 2]);
        assert_eq!(*fetched.borrow(), 1);
    }

    #[test]
    fn test_pager_stops_after_error() {
        let mut pager = Pager::new(|token: Option<&str>| match token {
            None => Ok(Page::new(vec![1], Some("bad".into()))),
            Some(t) => serve(t),
        });

        assert_eq!(pager.next(), Some(Ok(1)));
        assert!(matches!(pager.next(), Some(Err(_))));
        assert_eq!(pager.next(), None);
    }
}
