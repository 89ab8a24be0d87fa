// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChildError {
    #[error("TESSERA_CHILD_CONFIG environment variable not set")]
    MissingConfig,

    #[error("parsing TESSERA_CHILD_CONFIG: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("handler config missing required setting {0:?}")]
    MissingHandlerSetting(String),

    #[error("unsupported handler scheme {0:?}")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Framing(#[from] tessera_wire::FramingError),
}
