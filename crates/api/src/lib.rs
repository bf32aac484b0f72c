// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
