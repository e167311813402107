// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

pub mod cli;
pub mod project_context;
pub mod workspace;
