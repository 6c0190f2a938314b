//! Stack growth for deep recursion.
//!
//! Parsing, evaluation and every walk over a nested value recurse once
//! per nesting level. Programs such as `reduce range(300000) as $i (null; [.])`
//! build values far deeper than a thread's stack can walk, so each recursive
//! step goes through [`ensure_sufficient_stack`], which moves onto a fresh
//! heap-allocated segment when the current one runs low.
//!
//! On wasm the closure is called directly.

/// Grow when less than this remains (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Size of each new segment (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first moving to a new stack segment if the current one is
/// nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Depth of a singly-linked chain, measured recursively.
    enum Chain {
        End,
        Link(Box<Chain>),
    }

    fn depth(chain: &Chain) -> usize {
        ensure_sufficient_stack(|| match chain {
            Chain::End => 0,
            Chain::Link(next) => depth(next) + 1,
        })
    }

    #[test]
    fn walks_a_chain_deeper_than_the_thread_stack() {
        let mut chain = Chain::End;
        for _ in 0..200_000 {
            chain = Chain::Link(Box::new(chain));
        }
        assert_eq!(depth(&chain), 200_000);

        // Box drop is recursive too; unwind it one link at a time.
        while let Chain::Link(next) = chain {
            chain = *next;
        }
    }

    #[test]
    fn passes_results_through() {
        let result: Result<i32, &str> = ensure_sufficient_stack(|| Ok(7));
        assert_eq!(result, Ok(7));
    }
}
