//! Stream constructors: from_iter, empty

use crate::error::StreamError;

use super::core::{Emitter, Stream};

impl<T> Stream<T, (), StreamError>
where
    T: Clone + 'static,
{
    /// Create a stream that emits every item of `source` and then settles.
    ///
    /// The source is consumed on first activation. Subscribing again after
    /// all values went out yields nothing; the stream has terminated.
    ///
    /// # Examples
    ///
    /// ```
    /// use plexus_stream::Stream;
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    /// let sink = Rc::clone(&seen);
    /// Stream::from_iter(vec![1, 2, 3]).for_each(move |value| sink.borrow_mut().push(value));
    /// assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    /// ```
    pub fn from_iter<I>(source: I) -> Self
    where
        I: IntoIterator<Item = T> + 'static,
    {
        let mut source = Some(source);
        Stream::new(move |emitter: Emitter<T, (), StreamError>| {
            if let Some(values) = source.take() {
                for value in values {
                    emitter.push(value);
                }
            }
            emitter.settle(());
            None
        })
    }

    /// Create a stream that settles immediately without emitting anything.
    pub fn empty() -> Self {
        Self::from_iter(std::iter::empty())
    }
}
