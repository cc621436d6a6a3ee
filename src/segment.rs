use crate::builtin::BuiltinHandler;
use crate::parser::Invocation;
use crate::resolver::CommandResolver;

/// A unit of pipeline execution.
///
/// Consecutive external invocations run as one OS-level process chain; each
/// built-in runs on its own, in-process.
pub enum Segment<'p> {
    BuiltIn {
        handler: BuiltinHandler,
        invocation: &'p Invocation,
    },
    External {
        invocations: Vec<&'p Invocation>,
    },
}

impl<'p> Segment<'p> {
    pub fn invocations(&self) -> Vec<&'p Invocation> {
        match self {
            Segment::BuiltIn { invocation, .. } => vec![*invocation],
            Segment::External { invocations } => invocations.clone(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Segment::BuiltIn { .. })
    }
}

impl std::fmt::Debug for Segment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::BuiltIn { invocation, .. } => {
                f.debug_tuple("BuiltIn").field(&invocation.command).finish()
            }
            Segment::External { invocations } => f
                .debug_tuple("External")
                .field(&invocations.iter().map(|i| &i.command).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Group `pipeline` into segments, preserving order.
///
/// Only the built-in table is consulted: anything that is not a built-in joins
/// the current external run, even if it will turn out not to exist.
pub fn segment<'p>(pipeline: &'p [Invocation], resolver: &CommandResolver) -> Vec<Segment<'p>> {
    let mut segments = Vec::new();
    let mut externals = Vec::new();

    for invocation in pipeline {
        match resolver.builtin(&invocation.command) {
            Some(handler) => {
                if !externals.is_empty() {
                    segments.push(Segment::External {
                        invocations: std::mem::take(&mut externals),
                    });
                }
                segments.push(Segment::BuiltIn {
                    handler,
                    invocation,
                });
            }
            None => externals.push(invocation),
        }
    }

    if !externals.is_empty() {
        segments.push(Segment::External {
            invocations: externals,
        });
    }
    segments
}
