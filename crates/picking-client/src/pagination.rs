use std::marker::PhantomData;

use futures::Stream;
use page_turner::{PageTurner, PageTurnerOutput, TurnedPage};

use crate::api_exec;

/// Rows requested of each page of a paginated read.
pub const PAGE_SIZE: usize = 1000;

/// PageRequest wraps a [`postgrest::Builder`] with the offset of its next page.
/// PostgREST caps the rows of a single response, so larger tables are read
/// as a sequence of Range-limited requests.
pub struct PageRequest {
    builder: postgrest::Builder,
    offset: usize,
    page_size: usize,
}

impl PageRequest {
    pub fn new(builder: postgrest::Builder) -> Self {
        Self::with_page_size(builder, PAGE_SIZE)
    }

    pub fn with_page_size(builder: postgrest::Builder, page_size: usize) -> Self {
        Self {
            builder,
            offset: 0,
            page_size,
        }
    }

    // PostgREST ranges are 0-based and inclusive on both ends.
    fn range(&self) -> (usize, usize) {
        (self.offset, self.offset + self.page_size - 1)
    }

    fn next(self, rows: usize) -> Self {
        Self {
            offset: self.offset + rows,
            ..self
        }
    }
}

/// PageReader executes PageRequests. The postgrest::Builder of each request
/// carries its own HTTP client, so the reader itself holds no state.
pub struct PageReader<Item> {
    phantom: PhantomData<fn() -> Item>,
}

impl<Item> PageReader<Item> {
    pub fn new() -> Self {
        Self {
            phantom: PhantomData,
        }
    }
}

/// Stream every row selected by `builder`, issuing as many page requests as required.
pub fn into_items<T>(builder: postgrest::Builder) -> impl Stream<Item = anyhow::Result<T>>
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    PageReader::<T>::new()
        .into_pages(PageRequest::new(builder))
        .items()
}

#[async_trait::async_trait]
impl<Item> PageTurner<PageRequest> for PageReader<Item>
where
    Item: serde::de::DeserializeOwned + Send + Sync,
{
    type PageItem = Item;
    type PageError = anyhow::Error;

    async fn turn_page(&self, request: PageRequest) -> PageTurnerOutput<Self, PageRequest> {
        let (lower, upper) = request.range();
        let rows: Vec<Item> = api_exec(request.builder.clone().range(lower, upper)).await?;

        if rows.len() >= request.page_size {
            tracing::debug!(
                offset = request.offset,
                rows = rows.len(),
                "read a full page, continuing to the next"
            );
            let next = request.next(rows.len());
            Ok(TurnedPage::next(rows, next))
        } else {
            tracing::debug!(
                offset = request.offset,
                rows = rows.len(),
                "read a partial page, done"
            );
            Ok(TurnedPage::last(rows))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_page_ranges() {
        let builder = postgrest::Postgrest::new("http://localhost/rest/v1").from("inventory");
        let request = PageRequest::with_page_size(builder, 50);

        assert_eq!(request.range(), (0, 49));
        let request = request.next(50);
        assert_eq!(request.range(), (50, 99));
    }
}
