/// A message flashed by request handling code, shown once by `get_flashed_messages`.
#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub message: String,
    pub category: String,
}

/// Flashed messages of one page. The last flashed message is displayed first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlashQueue {
    messages: Vec<Flash>,
}

impl FlashQueue {
    pub fn new() -> Self {
        FlashQueue::default()
    }

    pub fn push(&mut self, message: impl Into<String>, category: impl Into<String>) {
        self.messages.push(Flash {
            message: message.into(),
            category: category.into(),
        });
    }

    /// Removes the most recently flashed message.
    pub fn pop(&mut self) -> Option<Flash> {
        self.messages.pop()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[test]
fn last_in_first_out() {
    let mut flashes = FlashQueue::new();
    flashes.push("first", "info");
    flashes.push("second", "error");
    assert_eq!(flashes.len(), 2);

    assert_eq!(
        flashes.pop(),
        Some(Flash {
            message: "second".to_string(),
            category: "error".to_string()
        })
    );
    assert_eq!(flashes.pop().unwrap().message, "first");
    assert_eq!(flashes.pop(), None);
    assert!(flashes.is_empty());
}
