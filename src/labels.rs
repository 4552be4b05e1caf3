// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer constants.

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `ValidatorFailover` resources
pub const FINALIZER_VALIDATOR_FAILOVER: &str =
    "failover.firestoned.io/validatorfailover-finalizer";
